use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=R5560_LIB_DIR");
    if env::var_os("CARGO_FEATURE_R5560").is_some() {
        let lib_dir = env::var("R5560_LIB_DIR").unwrap_or_else(|_| "/usr/local/lib".to_string());
        println!("cargo:rustc-link-search=native={}", lib_dir);
        println!("cargo:rustc-link-lib=dylib=r5560");
    }
}
