// Core modules implementing the pet record, storage, and error modeling.
pub mod error;
pub mod pet;
pub mod store;
