pub(crate) mod assessments;
pub(crate) mod banks;
pub(crate) mod questions;
pub(crate) mod sessions;
pub(crate) mod submissions;
pub(crate) mod violations;
