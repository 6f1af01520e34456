pub mod descriptor_set;
