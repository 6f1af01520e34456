use glam::{Mat4, Vec3, Vec4};

use crate::render_pipeline::gpu_culling::cull_object::{BoundingBox, CullableObject, GpuDrawIndexedIndirect};

/// 视锥的六个平面，顺序为 left, right, bottom, top, near, far
///
/// 每个平面为 `(normal, distance)`，法线指向视锥内部：`dot(normal, p) + distance >= 0` 表示在内侧。
/// 作为 uniform buffer 上传，布局和 shader 中的 `vec4 planes[6]` 一致。
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrustumPlanes {
    pub planes: [Vec4; 6],
}

impl FrustumPlanes {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const BOTTOM: usize = 2;
    pub const TOP: usize = 3;
    pub const NEAR: usize = 4;
    pub const FAR: usize = 5;

    /// 从 view-projection 矩阵的行中提取平面（Gribb-Hartmann）
    ///
    /// - `depth_zero_to_one`：裁剪空间深度范围为 [0, 1]（Vulkan），否则为 [-1, 1]（OpenGL）
    /// - 法线长度接近 0 的平面保持原样，不做归一化
    pub fn from_view_proj(view_proj: Mat4, depth_zero_to_one: bool) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);

        let near = if depth_zero_to_one { r2 } else { r3 + r2 };
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, near, r3 - r2].map(normalize_plane);

        Self { planes }
    }

    /// 保守的 AABB 测试：`bounds` 位于物体局部空间，`transform` 为 local -> world
    ///
    /// 包围盒完全位于任意一个平面外侧时不可见；无效的包围盒不可见
    pub fn aabb_visible(&self, bounds: &BoundingBox, transform: &Mat4) -> bool {
        if !bounds.is_valid() {
            return false;
        }

        let center = transform.transform_point3(bounds.center());
        let local_extents = bounds.half_extents();
        let extents = transform.x_axis.truncate().abs() * local_extents.x
            + transform.y_axis.truncate().abs() * local_extents.y
            + transform.z_axis.truncate().abs() * local_extents.z;

        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            normal.dot(center) + plane.w + normal.abs().dot(extents) >= 0.0
        })
    }

    #[inline]
    pub fn point_inside(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.truncate().dot(point) + plane.w >= 0.0)
    }

    /// 在 CPU 上执行和 shader 相同的剔除，结果按提交顺序紧密排列
    pub fn cull_on_cpu(&self, objects: &[CullableObject]) -> Vec<GpuDrawIndexedIndirect> {
        objects
            .iter()
            .enumerate()
            .filter(|(_, object)| self.aabb_visible(&object.bounds, &object.transform))
            .map(|(index, object)| GpuDrawIndexedIndirect::for_object(object, index as u32))
            .collect()
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let length = plane.truncate().length();
    if length > f32::EPSILON { plane / length } else { plane }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_planes() -> FrustumPlanes {
        // 相机位于原点，看向 -Z
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        FrustumPlanes::from_view_proj(proj * view, true)
    }

    fn unit_cube_at(position: Vec3) -> CullableObject {
        CullableObject {
            bounds: BoundingBox::from_center(Vec3::ZERO, Vec3::splat(0.5)),
            transform: Mat4::from_translation(position),
            index_count: 36,
            ..Default::default()
        }
    }

    #[test]
    fn test_planes_are_normalized() {
        let frustum = camera_planes();
        for plane in frustum.planes {
            assert!((plane.truncate().length() - 1.0).abs() < 1e-5);
        }
        // 近平面法线指向 -Z，远平面指向 +Z
        assert!(frustum.planes[FrustumPlanes::NEAR].z < -0.99);
        assert!(frustum.planes[FrustumPlanes::FAR].z > 0.99);
    }

    #[test]
    fn test_degenerate_matrix_is_not_normalized() {
        let frustum = FrustumPlanes::from_view_proj(Mat4::ZERO, true);
        assert!(frustum.planes.iter().all(|p| *p == Vec4::ZERO));
    }

    #[test]
    fn test_near_plane_depth_convention() {
        let near = 0.1;
        let vulkan = FrustumPlanes::from_view_proj(Mat4::perspective_rh(1.0, 1.0, near, 100.0), true);
        let opengl = FrustumPlanes::from_view_proj(Mat4::perspective_rh_gl(1.0, 1.0, near, 100.0), false);

        for frustum in [vulkan, opengl] {
            assert!(frustum.point_inside(Vec3::new(0.0, 0.0, -(near + 0.01))));
            assert!(!frustum.point_inside(Vec3::new(0.0, 0.0, -(near - 0.01))));
            // 近平面到原点的距离
            assert!((frustum.planes[FrustumPlanes::NEAR].w + near).abs() < 1e-4);
        }
    }

    #[test]
    fn test_aabb_visibility() {
        let frustum = camera_planes();

        let cases = [
            (Vec3::new(0.0, 0.0, -5.0), true),
            // 相机后方
            (Vec3::new(0.0, 0.0, 5.0), false),
            // 超出远平面
            (Vec3::new(0.0, 0.0, -150.0), false),
            // 远离左侧
            (Vec3::new(-50.0, 0.0, -5.0), false),
            // 中心在视锥外，但包围盒和近平面相交
            (Vec3::new(0.0, 0.0, 0.3), true),
        ];
        for (position, expected) in cases {
            let object = unit_cube_at(position);
            assert_eq!(
                frustum.aabb_visible(&object.bounds, &object.transform),
                expected,
                "position {position:?}"
            );
        }

        // 无效包围盒
        assert!(!frustum.aabb_visible(&BoundingBox::default(), &Mat4::IDENTITY));
    }

    #[test]
    fn test_rotated_box_uses_world_extents() {
        let frustum = camera_planes();
        // 沿 X 轴的细长盒子位于相机后方，绕 Y 轴旋转 90 度后沿 Z 轴伸进视锥
        let bounds = BoundingBox::from_center(Vec3::ZERO, Vec3::new(20.0, 0.1, 0.1));
        let unrotated = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let rotated = unrotated * Mat4::from_rotation_y(90f32.to_radians());

        assert!(!frustum.aabb_visible(&bounds, &unrotated));
        assert!(frustum.aabb_visible(&bounds, &rotated));
    }

    #[test]
    fn test_cull_on_cpu_compacts_commands() {
        let frustum = camera_planes();
        let objects = vec![
            unit_cube_at(Vec3::new(0.0, 0.0, -5.0)),
            unit_cube_at(Vec3::new(0.0, 0.0, 5.0)),
            unit_cube_at(Vec3::new(1.0, 0.0, -10.0)),
        ];

        let draws = frustum.cull_on_cpu(&objects);
        assert_eq!(draws.iter().map(|d| d.first_instance).collect::<Vec<_>>(), vec![0, 2]);
        assert!(draws.iter().all(|d| d.instance_count == 1 && d.index_count == 36));
    }
}
