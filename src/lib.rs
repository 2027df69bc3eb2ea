//! vkinder: a VK matchmaking bot.
//!
//! Walks each user through a short questionnaire (city, age, sex) and then
//! offers partners found through the VK API, one at a time, each with their
//! three most liked photos.

pub mod bot;
pub mod channels;
pub mod config;
pub mod dialog;
pub mod error;
pub mod model;
pub mod search;
pub mod social;
pub mod store;
pub mod vk;
