use std::{env, path::Path};

// ffmpeg-sys-next finds FFmpeg through pkg-config on Unix. On Windows it needs
// FFMPEG_DIR; point at a vcpkg install when one is present.
fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_TRIPLET", "VCPKGRS_DYNAMIC"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    let windows = env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "windows");
    if !windows || env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        println!(
            "cargo:warning=scenecut needs FFmpeg: set FFMPEG_DIR, or install ffmpeg with vcpkg and set VCPKG_ROOT."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install = Path::new(&vcpkg_root).join("installed").join(&triplet);
    if install.is_dir() {
        println!(
            "cargo:warning=Found vcpkg FFmpeg ({triplet}) at {}; set FFMPEG_DIR to it if linking fails.",
            install.display()
        );
    } else {
        println!(
            "cargo:warning=VCPKG_ROOT has no {triplet} install at {}.",
            install.display()
        );
    }
}
