//! Data Transfer Objects
//!
//! View models handed from the session runtime to the presentation layer.

pub mod view;

pub use view::{ActiveRoomView, ConnectionView, FeedListView, RoomListItem, SessionView};
