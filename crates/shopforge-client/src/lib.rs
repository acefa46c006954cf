//! Client SDK for the shopforge service.
//!
//! Used by internal services that create shops or inspect balances on a
//! user's behalf.
//!
//! # Example
//!
//! ```no_run
//! use shopforge_client::{CreateShopRequest, ShopforgeClient};
//!
//! # async fn example() -> Result<(), shopforge_client::ClientError> {
//! let client = ShopforgeClient::new("http://shopforge:8080", "user-jwt");
//!
//! let accepted = client
//!     .create_shop(CreateShopRequest {
//!         shop_name: "Acme".into(),
//!         admin_email: "admin@acme.com".into(),
//!         admin_password: "secret-pass".into(),
//!         plan: None,
//!     })
//!     .await?;
//!
//! let shop = client.get_shop(&accepted.shop_id).await?;
//! println!("shop status: {}", shop.status);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientOptions, ShopforgeClient};
pub use error::ClientError;
pub use types::{
    BalanceResponse, CreateShopRequest, CreateShopResponse, DeploymentSummary, ShopDetail,
};
