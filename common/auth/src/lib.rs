pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod extractors;
pub mod roles;

pub use claims::{Claims, Principal, TokenKind};
pub use codec::{IssuedToken, TokenCodec};
pub use config::{JwtConfig, JwtConfigError, DEFAULT_REFRESH_TTL_SECONDS, DEV_SECRET};
pub use error::{AuthError, AuthResult};
pub use extractors::AuthContext;
pub use roles::{Role, UnknownRole, ALL_ROLES, ROLE_ADMIN, ROLE_STUDENT, ROLE_TEACHER};
