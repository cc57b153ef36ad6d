use std::error::Error;
use std::sync::Arc;

use clap::{App, Arg};
use rfw_import::{AssetCache, ExtensionImporter, ImportSettings, SkeletonPose};
use rfw_utils::{task::TaskPool, Timer};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = App::new("rfw-inspect")
        .about("Imports a model and prints its meshes, skeleton and animations.")
        .arg(
            Arg::with_name("file")
                .required(true)
                .index(1)
                .help("Model to import (gltf, glb or obj)"),
        )
        .arg(
            Arg::with_name("clip")
                .short("c")
                .long("clip")
                .takes_value(true)
                .help("Animation to sample, defaults to the first one"),
        )
        .arg(
            Arg::with_name("time")
                .short("t")
                .long("time")
                .takes_value(true)
                .default_value("0")
                .help("Playback time in seconds"),
        )
        .arg(
            Arg::with_name("no-loop")
                .long("no-loop")
                .help("Clamp playback time instead of wrapping it"),
        )
        .arg(
            Arg::with_name("threads")
                .short("j")
                .long("threads")
                .takes_value(true)
                .help("Number of import threads"),
        )
        .get_matches();

    let file = matches.value_of("file").ok_or("no file given")?;
    let time: f32 = matches.value_of("time").unwrap_or("0").parse()?;
    let pool = match matches.value_of("threads") {
        Some(n) => TaskPool::new(n.parse()?),
        None => TaskPool::default(),
    };

    let settings = ImportSettings::default().with_looping(!matches.is_present("no-loop"));
    let cache = AssetCache::with_pool(Arc::new(ExtensionImporter::default()), settings, pool);

    let timer = Timer::new();
    let model = cache.get_or_import_blocking(file)?;
    println!("{} ({:.2} ms)", model, timer.elapsed_in_millis());

    for mesh in model.meshes() {
        println!("  {}", mesh);
    }

    for (i, bone) in model.bones().iter().enumerate() {
        let parent = bone
            .parent()
            .map(|p| model.bones()[p].name.as_str())
            .unwrap_or("-");
        println!("  bone {:>3} {:<24} parent: {}", i, bone.name, parent);
    }

    let animations = match model.animations() {
        Some(animations) => animations,
        None => return Ok(()),
    };

    for clip in animations.iter() {
        println!(
            "  clip {:<24} {:.3} s, {} channels, looping: {}",
            clip.name,
            clip.duration,
            clip.channels.len(),
            clip.looping
        );
    }

    let clip = match matches.value_of("clip") {
        Some(name) => animations
            .get_by_name(name)
            .ok_or_else(|| format!("model has no clip called {}", name))?,
        None => match animations.get(0) {
            Some(clip) => clip,
            None => return Ok(()),
        },
    };

    let mut pose = SkeletonPose::new(model.bones());
    pose.apply_clip(&model, clip, time);

    println!(
        "pose of {} at {:.3} s (normalized {:.3} s):",
        clip.name,
        time,
        clip.normalize_time(time)
    );
    for (bone, world) in model.bones().iter().zip(pose.world_transforms()) {
        let (_, _, translation) = world.to_scale_rotation_translation();
        println!("  {:<24} {:?}", bone.name, translation);
    }

    for sample in clip.sample(time).iter() {
        if model.bone_index(sample.target).is_none() {
            println!(
                "  {:<24} (not a bone) {:?}",
                sample.target, sample.transform.translation
            );
        }
    }

    Ok(())
}
