//! # verdant-cli
//!
//! Command-line client for a Verdant plant marketplace.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `verdant plants list` | List every plant |
//! | `verdant plants show <id>` | Show one plant |
//! | `verdant plants add ...` | Upload an image and list a new plant |
//! | `verdant role <email>` | Resolve the role of a user |
//!
//! Configuration is read from `application.yaml` / `application-{profile}.yaml`
//! in the working directory, `.env` files and the environment (`API_URL`,
//! `API_TOKEN`, ...).

pub mod commands;
