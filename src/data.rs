pub mod bar;
pub mod domain;
