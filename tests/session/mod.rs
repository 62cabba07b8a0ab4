//! Session scenario tests.

mod connection_tests;
mod feed_tests;
mod lifecycle_tests;
mod notification_tests;
mod presence_tests;
mod room_tests;
