use crate::animation::extract_animations;
use crate::flatten::{collect_bone_names, flatten_skeleton};
use crate::model::{JointData, Mesh, ModelData};
use crate::settings::{ImportSettings, MAX_INFLUENCES};
use crate::skin::{resolve_skin_weights, SkinReport};
use crate::source::{SourceMesh, SourceScene};
use crate::ImportError;
use rayon::prelude::*;
use rfw_math::*;
use rfw_utils::{log, Timer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

fn check_cancelled(cancel: &AtomicBool) -> Result<(), ImportError> {
    if cancel.load(Ordering::Acquire) {
        Err(ImportError::Cancelled)
    } else {
        Ok(())
    }
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Fills `values` up to `count` entries with zeroes if it is not already exactly that long.
fn fit_attribute<T: Copy + Default>(
    values: &[T],
    count: usize,
    mesh: &str,
    what: &str,
) -> Vec<T> {
    if values.len() == count {
        return values.to_vec();
    }

    if !values.is_empty() {
        log::warn!(
            "mesh \"{}\": has {} {} for {} vertices, ignoring them",
            mesh,
            values.len(),
            what,
            count
        );
    }

    vec![T::default(); count]
}

/// Converts one source mesh into an indexed triangle mesh with four influences per vertex.
///
/// The report lists what had to be corrected in the mesh's skin weights.
pub fn build_mesh(
    source: &SourceMesh,
    bone_map: &HashMap<String, usize>,
    settings: &ImportSettings,
) -> (Mesh, SkinReport) {
    let vertex_count = source.positions.len();

    let mut indices = Vec::with_capacity(source.faces.len() * 3);
    let mut skipped = 0;
    for face in source.faces.iter() {
        if face.len() != 3 || face.iter().any(|i| *i as usize >= vertex_count) {
            skipped += 1;
            continue;
        }
        indices.extend_from_slice(face.as_slice());
    }

    if skipped > 0 {
        log::warn!(
            "mesh \"{}\": skipped {} faces that were not triangles or referenced missing vertices",
            source.name,
            skipped
        );
    }

    let skinned = !source.bones.is_empty();
    let (skin_data, report) = if skinned {
        resolve_skin_weights(source, bone_map, settings)
    } else {
        (vec![JointData::default(); vertex_count], SkinReport::default())
    };

    let mesh = Mesh {
        name: source.name.clone(),
        positions: source.positions.clone(),
        normals: fit_attribute::<Vec3>(&source.normals, vertex_count, &source.name, "normals"),
        uvs: fit_attribute::<Vec2>(&source.uvs, vertex_count, &source.name, "uvs"),
        indices,
        material_index: source.material_index,
        skin_data,
        skinned,
    };

    (mesh, report)
}

/// Runs the full conversion of an externally parsed scene.
///
/// `cancel` is polled between stages; once raised the import stops with
/// [`ImportError::Cancelled`]. Either a complete model is returned or nothing.
pub fn import_model(
    scene: &SourceScene,
    path: &Path,
    settings: &ImportSettings,
    cancel: &AtomicBool,
) -> Result<ModelData, ImportError> {
    let timer = Timer::new();

    if scene.meshes.is_empty() {
        return Err(ImportError::NoMeshes(path.to_path_buf()));
    }

    check_cancelled(cancel)?;
    let bone_names = collect_bone_names(&scene.meshes);
    let mut skeleton = flatten_skeleton(&scene.root, &bone_names);
    skeleton.assign_offsets(&scene.meshes);

    check_cancelled(cancel)?;
    let (meshes, reports): (Vec<Mesh>, Vec<SkinReport>) = scene
        .meshes
        .par_iter()
        .map(|m| build_mesh(m, &skeleton.bone_map, settings))
        .unzip();

    let mut skin_report = SkinReport::default();
    for report in reports.into_iter() {
        skin_report.merge(report);
    }

    if !skin_report.is_clean() {
        log::warn!(
            "{}: corrected skin weights ({} dangling bones, {} vertices over {} influences, {} invalid influences, {} unweighted vertices)",
            path.display(),
            skin_report.dangling_bones.len(),
            skin_report.truncated_vertices,
            MAX_INFLUENCES,
            skin_report.invalid_influences,
            skin_report.degenerate_vertices
        );
    }

    check_cancelled(cancel)?;
    let animations = if settings.import_animations && !scene.animations.is_empty() {
        Some(extract_animations(&scene.animations, settings))
    } else {
        None
    };

    check_cancelled(cancel)?;
    let model = ModelData::new(
        model_name(path),
        meshes,
        skeleton.bones,
        skeleton.bone_map,
        animations,
    );

    log::info!(
        "imported {} in {:.2} ms: {} meshes, {} bones, {} clips",
        path.display(),
        timer.elapsed_in_millis(),
        model.meshes().len(),
        model.bones().len(),
        model.animations().map(|a| a.len()).unwrap_or(0)
    );

    Ok(model)
}
