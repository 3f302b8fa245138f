// File intake: validates uploaded CV / project files, extracts their text
// and archives the originals to object storage.

pub mod extract;
pub mod handlers;
pub mod storage;
