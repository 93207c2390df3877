// src/github/mod.rs

pub mod client;

pub use client::{GitHubClient, RepoCandidate};
