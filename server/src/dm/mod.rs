//! One-to-one conversations and their messages over REST.
//!
//! Every mutation persists first and then publishes the matching realtime
//! event through `chat::broadcast`.

pub mod conversations;
pub mod messages;
