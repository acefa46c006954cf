//! Cross-service SSO token minting.
//!
//! Mints short-lived, shop-scoped tokens signed with the shop's SSO
//! secret. The feature backend validates them with the same secret it
//! received at tenant registration.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use shopforge_core::Shop;

/// Token lifetime.
const TOKEN_TTL_SECS: i64 = 3600;

/// Issuer claim on minted tokens.
const TOKEN_ISSUER: &str = "shopforge";

/// Claims carried by a cross-service SSO token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SsoClaims {
    /// Subject: the shop id.
    pub sub: String,

    /// The shop's slug, the tenant key on the feature backend.
    pub slug: String,

    /// Role granted to the bearer.
    pub role: String,

    /// Issuer.
    pub iss: String,

    /// Issued at (Unix seconds).
    pub iat: i64,

    /// Expiration (Unix seconds).
    pub exp: i64,
}

/// Mint a short-lived SSO token for a shop.
///
/// # Errors
///
/// Returns an error if JWT encoding fails.
pub fn mint_sso_token(
    shop: &Shop,
    sso_secret: &str,
    role: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = SsoClaims {
        sub: shop.id.to_string(),
        slug: shop.slug.clone(),
        role: role.to_string(),
        iss: TOKEN_ISSUER.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(TOKEN_TTL_SECS)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(sso_secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use shopforge_core::{Plan, UserId};

    #[test]
    fn minted_token_validates_with_shop_secret() {
        let shop = Shop::new(UserId::generate(), "Acme", Plan::Starter);
        let secret = "super-secret";

        let token = mint_sso_token(&shop, secret, "owner").unwrap();

        let mut validation = Validation::default();
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.validate_aud = false;
        let data = decode::<SsoClaims>(
            &token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .unwrap();

        assert_eq!(data.claims.sub, shop.id.to_string());
        assert_eq!(data.claims.slug, "acme");
        assert_eq!(data.claims.role, "owner");
        assert!(data.claims.exp - data.claims.iat == TOKEN_TTL_SECS);
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let shop = Shop::new(UserId::generate(), "Acme", Plan::Starter);
        let token = mint_sso_token(&shop, "right-secret", "owner").unwrap();

        let mut validation = Validation::default();
        validation.validate_aud = false;
        let result = decode::<SsoClaims>(
            &token,
            &DecodingKey::from_secret(b"wrong-secret"),
            &validation,
        );
        assert!(result.is_err());
    }
}
