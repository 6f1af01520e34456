pub mod gpu_culling;
