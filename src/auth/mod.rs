pub(crate) mod authorizer;
pub(crate) mod cache;
pub(crate) mod keys;
