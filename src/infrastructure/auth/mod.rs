mod claims;
mod extractor;
mod jwt;

pub use claims::Claims;
pub use extractor::{extract_bearer_token, AuthUser};
pub use jwt::JwtValidator;
