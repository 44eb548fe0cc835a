pub(crate) mod analyze;
pub(crate) mod flocks;
pub(crate) mod formula;
pub(crate) mod helpers;
pub(crate) mod sensitivity;
