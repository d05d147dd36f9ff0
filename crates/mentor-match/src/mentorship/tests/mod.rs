mod admin;
mod common;
mod concurrency;
