pub mod composite;
pub mod pager;
