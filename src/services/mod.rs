pub mod csv_source;
pub mod export;
pub mod imagine;
pub mod imaging;
pub mod linkedin;
pub mod notify;
pub mod pipeline;
pub mod rate_limit;
pub mod storage;
