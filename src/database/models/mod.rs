pub mod relation;
