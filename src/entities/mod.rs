pub mod task;

pub use task::Entity as Task;
