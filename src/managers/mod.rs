pub mod document;
pub mod workitem;
