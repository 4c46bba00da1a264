//! Intel Embree 4 intersection backend (`embree` feature).
//!
//! Manual FFI bindings covering only the calls needed for one static
//! triangle mesh: build, nearest hit, and occlusion.

use std::ffi::c_void;

use bytemuck::{Pod, Zeroable};
use glint_core::BuildTriangle;
use glint_math::{Aabb, Interval, Ray, Vec3};

use crate::intersect::{validate_triangles, BuildError, Hit, Intersector, IntersectorBackend};

// ============================================================================
// Embree FFI Bindings
// ============================================================================

#[allow(non_camel_case_types)]
type RTCDevice = *mut c_void;

#[allow(non_camel_case_types)]
type RTCScene = *mut c_void;

#[allow(non_camel_case_types)]
type RTCGeometry = *mut c_void;

// From rtcore_geometry.h
const RTC_GEOMETRY_TYPE_TRIANGLE: u32 = 0;

// From rtcore_buffer.h
const RTC_BUFFER_TYPE_INDEX: u32 = 0;
const RTC_BUFFER_TYPE_VERTEX: u32 = 1;

// From rtcore_common.h
const RTC_FORMAT_UINT3: u32 = 0x5003;
const RTC_FORMAT_FLOAT3: u32 = 0x9003;

const RTC_INVALID_GEOMETRY_ID: u32 = u32::MAX;

// Ray structure matching Embree's RTCRay
#[repr(C, align(16))]
#[derive(Debug, Copy, Clone)]
struct RTCRay {
    org_x: f32,
    org_y: f32,
    org_z: f32,
    tnear: f32,

    dir_x: f32,
    dir_y: f32,
    dir_z: f32,
    time: f32,

    tfar: f32,
    mask: u32,
    id: u32,
    flags: u32,
}

// Hit structure matching Embree's RTCHit
#[repr(C, align(16))]
#[derive(Debug, Copy, Clone)]
struct RTCHit {
    ng_x: f32,
    ng_y: f32,
    ng_z: f32,

    u: f32,
    v: f32,

    prim_id: u32,
    geom_id: u32,
    inst_id: [u32; 1],
}

// Combined ray-hit structure for rtcIntersect1
#[repr(C, align(16))]
#[derive(Debug, Copy, Clone)]
struct RTCRayHit {
    ray: RTCRay,
    hit: RTCHit,
}

// Bounds structure for rtcGetSceneBounds
#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
struct RTCBounds {
    lower_x: f32,
    lower_y: f32,
    lower_z: f32,
    align0: f32,

    upper_x: f32,
    upper_y: f32,
    upper_z: f32,
    align1: f32,
}

#[link(name = "embree4")]
extern "C" {
    fn rtcNewDevice(config: *const std::ffi::c_char) -> RTCDevice;
    fn rtcReleaseDevice(device: RTCDevice);
    fn rtcGetDeviceError(device: RTCDevice) -> i32;

    fn rtcNewScene(device: RTCDevice) -> RTCScene;
    fn rtcReleaseScene(scene: RTCScene);
    fn rtcCommitScene(scene: RTCScene);
    fn rtcGetSceneBounds(scene: RTCScene, bounds: *mut RTCBounds);

    fn rtcNewGeometry(device: RTCDevice, geom_type: u32) -> RTCGeometry;
    fn rtcReleaseGeometry(geom: RTCGeometry);
    fn rtcCommitGeometry(geom: RTCGeometry);
    fn rtcAttachGeometry(scene: RTCScene, geom: RTCGeometry) -> u32;

    fn rtcSetSharedGeometryBuffer(
        geom: RTCGeometry,
        buffer_type: u32,
        slot: u32,
        format: u32,
        ptr: *const c_void,
        byte_offset: usize,
        byte_stride: usize,
        item_count: usize,
    );

    fn rtcIntersect1(scene: RTCScene, rayhit: *mut RTCRayHit, args: *const c_void);
    fn rtcOccluded1(scene: RTCScene, ray: *mut RTCRay, args: *const c_void);
}

fn error_name(code: i32) -> &'static str {
    match code {
        1 => "RTC_ERROR_UNKNOWN",
        2 => "RTC_ERROR_INVALID_ARGUMENT",
        3 => "RTC_ERROR_INVALID_OPERATION",
        4 => "RTC_ERROR_OUT_OF_MEMORY",
        5 => "RTC_ERROR_UNSUPPORTED_CPU",
        6 => "RTC_ERROR_CANCELLED",
        _ => "UNKNOWN_ERROR",
    }
}

/// Vertex layout handed to Embree. Padded to 16 bytes because Embree may
/// read a full SSE lane past the last float.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct EmbreeVertex {
    x: f32,
    y: f32,
    z: f32,
    _pad: f32,
}

impl RTCRay {
    fn new(ray: &Ray, ray_t: Interval) -> Self {
        Self {
            org_x: ray.origin.x,
            org_y: ray.origin.y,
            org_z: ray.origin.z,
            tnear: ray_t.min,

            dir_x: ray.direction.x,
            dir_y: ray.direction.y,
            dir_z: ray.direction.z,
            time: 0.0,

            tfar: ray_t.max,
            mask: u32::MAX,
            id: 0,
            flags: 0,
        }
    }
}

// ============================================================================
// EmbreeIntersector
// ============================================================================

/// Triangle scene committed to an Embree device.
pub struct EmbreeIntersector {
    device: RTCDevice,
    scene: RTCScene,
    /// Original records, indexed by Embree primitive ID.
    triangles: Vec<BuildTriangle>,

    // Embree holds pointers into these
    vertex_data: Vec<EmbreeVertex>,
    index_data: Vec<[u32; 3]>,
}

impl EmbreeIntersector {
    pub fn new(vertices: &[Vec3], triangles: Vec<BuildTriangle>) -> Result<Self, BuildError> {
        validate_triangles(vertices, &triangles)?;

        let vertex_data: Vec<EmbreeVertex> = vertices
            .iter()
            .map(|v| EmbreeVertex {
                x: v.x,
                y: v.y,
                z: v.z,
                _pad: 0.0,
            })
            .collect();
        let index_data: Vec<[u32; 3]> = triangles.iter().map(|t| t.indices).collect();

        unsafe {
            let device = rtcNewDevice(std::ptr::null());
            if device.is_null() {
                return Err(BuildError::Device("failed to create Embree device".into()));
            }

            let check = |stage: &str| -> Result<(), BuildError> {
                let err = rtcGetDeviceError(device);
                if err != 0 {
                    Err(BuildError::Device(format!("{} after {}", error_name(err), stage)))
                } else {
                    Ok(())
                }
            };

            let scene = rtcNewScene(device);
            if scene.is_null() {
                rtcReleaseDevice(device);
                return Err(BuildError::Device("failed to create Embree scene".into()));
            }

            // From here on, Drop releases the device and scene
            let intersector = Self {
                device,
                scene,
                triangles,
                vertex_data,
                index_data,
            };

            if !intersector.triangles.is_empty() {
                let geom = rtcNewGeometry(device, RTC_GEOMETRY_TYPE_TRIANGLE);
                if geom.is_null() {
                    return Err(BuildError::Device("failed to create Embree geometry".into()));
                }

                let vertex_bytes: &[u8] = bytemuck::cast_slice(&intersector.vertex_data);
                rtcSetSharedGeometryBuffer(
                    geom,
                    RTC_BUFFER_TYPE_VERTEX,
                    0,
                    RTC_FORMAT_FLOAT3,
                    vertex_bytes.as_ptr() as *const c_void,
                    0,
                    std::mem::size_of::<EmbreeVertex>(),
                    intersector.vertex_data.len(),
                );
                check("setting vertex buffer")?;

                let index_bytes: &[u8] = bytemuck::cast_slice(&intersector.index_data);
                rtcSetSharedGeometryBuffer(
                    geom,
                    RTC_BUFFER_TYPE_INDEX,
                    0,
                    RTC_FORMAT_UINT3,
                    index_bytes.as_ptr() as *const c_void,
                    0,
                    std::mem::size_of::<[u32; 3]>(),
                    intersector.index_data.len(),
                );
                check("setting index buffer")?;

                rtcCommitGeometry(geom);
                rtcAttachGeometry(scene, geom);
                rtcReleaseGeometry(geom);
                check("attaching geometry")?;
            }

            rtcCommitScene(scene);
            check("committing scene")?;

            log::info!(
                "Embree scene created: {} triangles, {} vertices",
                intersector.triangles.len(),
                intersector.vertex_data.len()
            );
            Ok(intersector)
        }
    }
}

impl Intersector for EmbreeIntersector {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        let mut rayhit = RTCRayHit {
            ray: RTCRay::new(ray, ray_t),
            hit: RTCHit {
                ng_x: 0.0,
                ng_y: 0.0,
                ng_z: 0.0,
                u: 0.0,
                v: 0.0,
                prim_id: RTC_INVALID_GEOMETRY_ID,
                geom_id: RTC_INVALID_GEOMETRY_ID,
                inst_id: [RTC_INVALID_GEOMETRY_ID],
            },
        };

        // Embree 4 API: scene, rayhit, args = NULL
        unsafe { rtcIntersect1(self.scene, &mut rayhit, std::ptr::null()) };

        if rayhit.hit.geom_id == RTC_INVALID_GEOMETRY_ID {
            return None;
        }
        let triangle = self.triangles.get(rayhit.hit.prim_id as usize)?;
        Some(Hit {
            object_id: triangle.object_id,
            face_id: triangle.face_id,
            u: rayhit.hit.u,
            v: rayhit.hit.v,
            t: rayhit.ray.tfar,
        })
    }

    fn occluded(&self, ray: &Ray, ray_t: Interval) -> bool {
        let mut shadow = RTCRay::new(ray, ray_t);
        unsafe { rtcOccluded1(self.scene, &mut shadow, std::ptr::null()) };
        // Embree sets tfar to -inf on a hit
        shadow.tfar == f32::NEG_INFINITY
    }

    fn bounds(&self) -> Aabb {
        if self.triangles.is_empty() {
            return Aabb::EMPTY;
        }
        let mut bounds = RTCBounds::default();
        unsafe { rtcGetSceneBounds(self.scene, &mut bounds) };
        Aabb::from_points(
            Vec3::new(bounds.lower_x, bounds.lower_y, bounds.lower_z),
            Vec3::new(bounds.upper_x, bounds.upper_y, bounds.upper_z),
        )
    }
}

impl Drop for EmbreeIntersector {
    fn drop(&mut self) {
        unsafe {
            rtcReleaseScene(self.scene);
            rtcReleaseDevice(self.device);
        }
    }
}

// SAFETY: the scene is committed before construction returns and never
// modified afterwards; Embree allows concurrent queries on a committed
// scene. The buffers it points into are owned by this struct.
unsafe impl Send for EmbreeIntersector {}
unsafe impl Sync for EmbreeIntersector {}

/// Builds an [`EmbreeIntersector`].
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbreeBackend;

impl IntersectorBackend for EmbreeBackend {
    fn name(&self) -> &'static str {
        "embree"
    }

    fn build(
        &self,
        vertices: Vec<Vec3>,
        triangles: Vec<BuildTriangle>,
    ) -> Result<Box<dyn Intersector>, BuildError> {
        Ok(Box::new(EmbreeIntersector::new(&vertices, triangles)?))
    }
}
