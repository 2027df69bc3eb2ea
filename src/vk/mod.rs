//! VK API plumbing shared by the social graph and the messaging channel.

pub mod api;

pub use api::{VK_API_BASE, VkApi};
