//! Remote API endpoints and environment names

/// Base URL used when neither the config file nor the environment set one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Environment variable overriding the configured base URL.
pub const BASE_URL_ENV: &str = "CLINIC_API_URL";

/// Email/password exchange for a token pair.
pub const SIGN_IN_PATH: &str = "/auth/signin";

/// Refresh-token exchange. The refresh token itself is the bearer.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Server-side session revocation, bearer = access token.
pub const LOGOUT_PATH: &str = "/auth/logout";

/// Message posted to the sign-in screen after a session could not be renewed.
pub const SESSION_EXPIRED_MESSAGE: &str = "your session has expired, please sign in again";
