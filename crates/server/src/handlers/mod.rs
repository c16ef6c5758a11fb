//! HTTP request handlers.

pub mod chunks;
pub mod files;
pub mod users;

pub use chunks::{get_chunk, get_chunk_list, put_chunk};
pub use files::{
    FileInfoResponse, delete_file, get_all_files, get_file_by_id, get_file_by_name, put_file,
};
pub use users::{LoginResponse, UserStatsResponse, login, user_stats};
