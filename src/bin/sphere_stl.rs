use std::path::PathBuf;

use anyhow::Result;
use glam::{UVec3, Vec3};

use tetramesh::marching_tets::MarchingTets;
use tetramesh::{mesh_triangles, stl, KeyMesh, SliceImage, Triangle};

fn main() -> Result<()> {
    env_logger::init();

    let mut resolution = 32usize;
    let mut output: Option<PathBuf> = None;
    let mut report = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--resolution" => {
                if let Some(value) = args.next() {
                    resolution = value.parse().unwrap_or(resolution);
                }
            }
            "--out" => {
                if let Some(value) = args.next() {
                    output = Some(PathBuf::from(value));
                }
            }
            "--report" => {
                report = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            _ => {}
        }
    }
    let output = output.unwrap_or_else(|| PathBuf::from("sphere.stl"));

    if resolution < 2 {
        anyhow::bail!("--resolution must be at least 2");
    }

    // A sphere filling most of the grid, as a signed distance field.
    let center = Vec3::splat((resolution - 1) as f32 / 2.0);
    let radius = (resolution - 1) as f32 * 0.4;
    log::info!("extracting a radius {radius} sphere from a {resolution}^3 grid");

    let mut engine = MarchingTets::new(resolution, resolution)?;
    let mut input = |dest: &mut SliceImage, z: usize| -> Result<()> {
        dest.fill_with(resolution, resolution, |x, y| {
            Vec3::new(x as f32, y as f32, z as f32).distance(center) - radius
        });
        Ok(())
    };

    let mut triangles: Vec<Triangle> = Vec::new();
    let mut sink = |mesh: KeyMesh<'_>| -> Result<()> {
        log::info!(
            "chunk: {} vertices ({} internal), {} triangles",
            mesh.vertices.len(),
            mesh.num_internal_vertices,
            mesh.triangles.len()
        );
        triangles.extend(mesh_triangles(mesh.vertices, mesh.triangles));
        Ok(())
    };

    let stats = engine.generate(
        &mut input,
        &mut sink,
        (resolution, resolution, resolution),
        UVec3::ZERO,
    )?;

    stl::write_binary_stl(&output, &triangles, "tetramesh sphere")?;
    println!(
        "wrote {} triangles to {} in {:.2}ms",
        triangles.len(),
        output.display(),
        stats.total_time_secs * 1000.0
    );
    if report {
        stats.print_report();
    }

    Ok(())
}

fn print_help() {
    eprintln!("Usage:");
    eprintln!("  sphere_stl [--resolution <n>] [--out <file.stl>] [--report]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --resolution  Samples per axis (default 32)");
    eprintln!("  --out         Output path (default sphere.stl)");
    eprintln!("  --report      Print the extraction stats report");
}
