//! In-memory volumes for tests.

/// Minimal single-file NIfTI-1 image with float32 voxels in Fortran order
/// and a voxel spacing of `(1, 1, 2)`.
pub fn nifti_bytes(
    dim: (usize, usize, usize),
    voxel: impl Fn(usize, usize, usize) -> f32,
) -> Vec<u8> {
    let (nx, ny, nz) = dim;
    let mut bytes = vec![0u8; 352];
    bytes[0..4].copy_from_slice(&348i32.to_le_bytes());
    let dims: [i16; 8] = [3, nx as i16, ny as i16, nz as i16, 1, 1, 1, 1];
    for (i, d) in dims.iter().enumerate() {
        bytes[40 + i * 2..42 + i * 2].copy_from_slice(&d.to_le_bytes());
    }
    // datatype FLOAT32, 32 bits per voxel
    bytes[70..72].copy_from_slice(&16i16.to_le_bytes());
    bytes[72..74].copy_from_slice(&32i16.to_le_bytes());
    let pixdim: [f32; 8] = [1.0, 1.0, 1.0, 2.0, 0.0, 0.0, 0.0, 0.0];
    for (i, p) in pixdim.iter().enumerate() {
        bytes[76 + i * 4..80 + i * 4].copy_from_slice(&p.to_le_bytes());
    }
    // vox_offset, scl_slope
    bytes[108..112].copy_from_slice(&352f32.to_le_bytes());
    bytes[112..116].copy_from_slice(&1f32.to_le_bytes());
    bytes[344..348].copy_from_slice(b"n+1\0");
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                bytes.extend_from_slice(&voxel(x, y, z).to_le_bytes());
            }
        }
    }
    bytes
}
