use std::env;
use std::path::PathBuf;

/// Points Windows builds of the `ffmpeg` feature at a vcpkg FFmpeg install.
fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_TRIPLET"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    let ffmpeg_enabled = env::var_os("CARGO_FEATURE_FFMPEG").is_some();
    let windows = env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "windows");
    if !ffmpeg_enabled || !windows || env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        println!(
            "cargo:warning=clipgif needs FFmpeg: set FFMPEG_DIR, or VCPKG_ROOT with ffmpeg installed through vcpkg, or build with --no-default-features --features gif."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let candidate = PathBuf::from(vcpkg_root).join("installed").join(triplet);
    if candidate.exists() {
        println!(
            "cargo:warning=Found vcpkg FFmpeg at {0}; set FFMPEG_DIR={0} to use it explicitly.",
            candidate.display()
        );
    } else {
        println!(
            "cargo:warning=No vcpkg FFmpeg install under {}.",
            candidate.display()
        );
    }
}
