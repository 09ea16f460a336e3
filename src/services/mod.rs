pub mod job_store;
pub mod providers;
pub mod retention;
pub mod storage;
pub mod submitter;
pub mod worker;
