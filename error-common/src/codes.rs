// Error codes implementation
// This module contains standardized error codes for the ImageVault engine

pub mod validation {
    pub const INVALID_INPUT: &str = "VALIDATION_1001";
}

pub mod authentication {
    pub const UNKNOWN_PUBLIC_KEY: &str = "AUTH_2001";
}

pub mod access_control {
    pub const ACCESS_DENIED: &str = "ACL_3001";
    pub const NOT_FOUND: &str = "ACL_3002";
    pub const CONFLICT: &str = "ACL_3003";
    pub const IMMUTABLE_ADAPTER: &str = "ACL_3004";
}

pub mod storage {
    pub const BACKEND_UNAVAILABLE: &str = "STORE_4001";
}

pub mod configuration {
    pub const INVALID_CONFIG: &str = "CONFIG_5001";
}

pub mod internal {
    pub const INTERNAL_ERROR: &str = "INTERNAL_9001";
}
