//! Tests for the CUDA image descriptor.

use magikgpu::image::CudaImage;
use magikgpu::spec::OciSpec;

#[test]
fn test_requirements_sorted_by_variable_name() {
    let image = CudaImage::from_env(&[
        "NVIDIA_REQUIRE_DRIVER=driver>=470",
        "NVIDIA_REQUIRE_CUDA=cuda>=11.4",
        "NVIDIA_REQUIRE_ARCH=arch>=7.2",
        "PATH=/usr/bin",
    ]);

    assert_eq!(
        image.requirements().unwrap(),
        vec!["arch>=7.2", "cuda>=11.4", "driver>=470"]
    );
}

#[test]
fn test_jetpack_variable_is_not_a_requirement() {
    let image = CudaImage::from_env(&[
        "NVIDIA_REQUIRE_JETPACK=csv-mounts=all",
        "NVIDIA_REQUIRE_CUDA=cuda>=10.2",
    ]);

    assert_eq!(image.requirements().unwrap(), vec!["cuda>=10.2"]);
}

#[test]
fn test_legacy_image_adds_cuda_requirement() {
    let image = CudaImage::from_env(&["CUDA_VERSION=10.2.89", "NVIDIA_REQUIRE_ARCH=arch>=5.3"]);

    assert!(image.is_legacy());
    assert_eq!(
        image.requirements().unwrap(),
        vec!["arch>=5.3", "cuda>=10.2"]
    );
}

#[test]
fn test_image_with_require_cuda_is_not_legacy() {
    let image = CudaImage::from_env(&["CUDA_VERSION=11.4.0", "NVIDIA_REQUIRE_CUDA=cuda>=11.4"]);

    assert!(!image.is_legacy());
    assert_eq!(image.requirements().unwrap(), vec!["cuda>=11.4"]);
}

#[test]
fn test_invalid_legacy_cuda_version() {
    let image = CudaImage::from_env(&["CUDA_VERSION=eleven"]);
    assert!(image.requirements().is_err());
}

#[test]
fn test_disable_require() {
    for (value, expected) in [
        ("1", true),
        ("true", true),
        ("TRUE", true),
        ("0", false),
        ("false", false),
        ("yes", false),
        ("", false),
    ] {
        let image = CudaImage::from_env(&[format!("NVIDIA_DISABLE_REQUIRE={value}")]);
        assert_eq!(image.has_disable_require(), expected, "value {value:?}");
    }

    assert!(!CudaImage::default().has_disable_require());
}

#[test]
fn test_from_spec_reads_process_env() {
    let spec = OciSpec::from_json(
        r#"{"process": {"env": ["NVIDIA_REQUIRE_CUDA=cuda>=12.0", "NVIDIA_DISABLE_REQUIRE=t"]}}"#,
    )
    .unwrap();
    let image = CudaImage::from_spec(&spec);

    assert_eq!(image.getenv("NVIDIA_REQUIRE_CUDA"), Some("cuda>=12.0"));
    assert!(image.has_disable_require());
}
