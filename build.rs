fn main() {
    let mut rpath = Vec::new();

    // Partitioner libraries (metis) installed outside the default search path
    if let Ok(ld) = std::env::var("PARTITIONER_LINK_DIRS") {
        for p in std::env::split_paths(&ld) {
            let s = p.display();
            rpath.push(s.to_string());
            println!("cargo:rustc-link-search={s}");
        }
    }
    println!("cargo:rerun-if-env-changed=PARTITIONER_LINK_DIRS");

    if let Ok(lib) = std::env::var("PARTITIONER_LIBRARIES") {
        for s in lib.split(',') {
            println!("cargo:rustc-link-lib={s}");
        }
    }
    println!("cargo:rerun-if-env-changed=PARTITIONER_LIBRARIES");

    for p in &rpath {
        // Needed to build the tests
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        println!("cargo:rustc-link-arg=-Wl,-rpath,{p}");
    }
}
