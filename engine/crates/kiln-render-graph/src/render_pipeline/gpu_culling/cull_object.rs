use glam::{Mat4, Vec3, Vec4};

/// 轴对齐包围盒（物体的局部空间）
///
/// 默认值是一个无效的空包围盒，任何视锥测试都不会通过
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}
impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Vec3::splat(1e30),
            max: Vec3::splat(-1e30),
        }
    }
}
impl BoundingBox {
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// 以 `center` 为中心，半边长为 `half_extents`
    #[inline]
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// 扩展包围盒使其包含 `point`
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }
}

/// 每帧提交给剔除管线的物体
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CullableObject {
    pub bounds: BoundingBox,
    pub transform: Mat4,
    pub mesh_index: u32,
    pub material_index: u32,
    pub index_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
}
impl Default for CullableObject {
    fn default() -> Self {
        Self {
            bounds: BoundingBox::default(),
            transform: Mat4::IDENTITY,
            mesh_index: 0,
            material_index: 0,
            index_count: 0,
            first_index: 0,
            vertex_offset: 0,
        }
    }
}

/// shader 中的物体数据，std430 布局
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuCullObject {
    /// w 未使用
    pub aabb_min: Vec4,
    pub aabb_max: Vec4,
    pub transform: Mat4,
    pub mesh_index: u32,
    pub material_index: u32,
    pub index_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub _padding: [u32; 3],
}
impl From<&CullableObject> for GpuCullObject {
    fn from(object: &CullableObject) -> Self {
        Self {
            aabb_min: object.bounds.min.extend(0.0),
            aabb_max: object.bounds.max.extend(0.0),
            transform: object.transform,
            mesh_index: object.mesh_index,
            material_index: object.material_index,
            index_count: object.index_count,
            first_index: object.first_index,
            vertex_offset: object.vertex_offset,
            _padding: [0; 3],
        }
    }
}

/// 与 `VkDrawIndexedIndirectCommand` 布局一致
///
/// `first_instance` 是物体在本帧提交列表中的序号，shader 通过它找回物体数据
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuDrawIndexedIndirect {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}
impl GpuDrawIndexedIndirect {
    pub fn for_object(object: &CullableObject, object_index: u32) -> Self {
        Self {
            index_count: object.index_count,
            instance_count: 1,
            first_index: object.first_index,
            vertex_offset: object.vertex_offset,
            first_instance: object_index,
        }
    }
}

/// compute shader 的 push constant
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuCullParams {
    pub object_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_layout_sizes() {
        assert_eq!(size_of::<GpuCullObject>(), 128);
        assert_eq!(size_of::<GpuDrawIndexedIndirect>(), 20);
        assert_eq!(size_of::<GpuCullParams>(), 4);
        assert_eq!(std::mem::offset_of!(GpuCullObject, transform), 32);
        assert_eq!(std::mem::offset_of!(GpuCullObject, mesh_index), 96);
    }

    #[test]
    fn test_bounding_box() {
        assert!(!BoundingBox::default().is_valid());

        let mut bounds = BoundingBox::default();
        bounds.expand(Vec3::new(1.0, 2.0, 3.0));
        bounds.expand(Vec3::new(-1.0, 0.0, 1.0));
        assert!(bounds.is_valid());
        assert_eq!(bounds.center(), Vec3::new(0.0, 1.0, 2.0));
        assert_eq!(bounds.half_extents(), Vec3::new(1.0, 1.0, 1.0));

        let cube = BoundingBox::from_center(Vec3::ZERO, Vec3::splat(0.5));
        assert_eq!(cube.size(), Vec3::ONE);
    }

    #[test]
    fn test_gpu_object_conversion() {
        let object = CullableObject {
            bounds: BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
            transform: Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            mesh_index: 3,
            material_index: 7,
            index_count: 36,
            first_index: 12,
            vertex_offset: -4,
        };

        let gpu = GpuCullObject::from(&object);
        assert_eq!(gpu.aabb_min, Vec4::new(-1.0, -1.0, -1.0, 0.0));
        assert_eq!(gpu.transform, object.transform);
        assert_eq!(gpu.vertex_offset, -4);

        let draw = GpuDrawIndexedIndirect::for_object(&object, 9);
        assert_eq!(
            draw,
            GpuDrawIndexedIndirect {
                index_count: 36,
                instance_count: 1,
                first_index: 12,
                vertex_offset: -4,
                first_instance: 9,
            }
        );
    }
}
