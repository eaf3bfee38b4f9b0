pub(crate) mod allocation;
pub(crate) mod draw;
pub(crate) mod finalize;
pub(crate) mod snapshot;
pub(crate) mod timing;
