//! Feed token issuance.
//!
//! Leaf components first:
//!
//! - [`path`]: `feeds/<id>/items` validation and feed id extraction
//! - [`action`]: actions and the client-grantable subset
//! - [`claims`]: canonical claims, their construction and [`Credential`]
//! - [`signer`]: [`TokenSigner`] implementations and the wire-format adapter
//! - [`cache`]: the self-renewing server credential
//! - [`engine`]: the [`AuthorizationEngine`] tying it together
//!
//! plus [`request`] (inbound request forms), [`tenant`], [`clock`],
//! [`policy`] (config-driven predicate) and [`audit`].

pub mod action;
pub mod audit;
pub mod cache;
pub mod claims;
pub mod clock;
pub mod engine;
pub mod path;
pub mod policy;
pub mod request;
pub mod signer;
pub mod tenant;

pub use action::{Action, CLIENT_GRANTABLE, validate_client_action};
pub use cache::ServerCredentialCache;
pub use claims::{Claims, ClaimsBuilder, Credential, Scope};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{
    AddressingMode, AuthorizationEngine, EngineBuilder, PermissionPredicate, sync_predicate,
};
pub use path::FeedPath;
pub use policy::PolicyPredicate;
pub use request::{AuthorizationRequest, TokenRequestBody};
pub use signer::{HmacSigner, RemoteSigner, TokenSigner, WireClaims};
pub use tenant::TenantIdentity;
