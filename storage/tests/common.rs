use std::fs;
use tempfile::TempDir;

/// 创建测试用的临时目录结构
pub fn create_test_structure() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    // 创建目录结构
    fs::create_dir_all(root.join("dir1/subdir1")).unwrap();
    fs::create_dir_all(root.join("empty_dir")).unwrap();
    fs::create_dir_all(root.join("deep/nested/structure/here")).unwrap();

    // 创建文件
    fs::write(root.join("file1.txt"), b"content1").unwrap();
    fs::write(root.join("dir1/file3.txt"), b"content3").unwrap();
    fs::write(root.join("dir1/subdir1/file4.txt"), b"content4").unwrap();
    fs::write(
        root.join("deep/nested/structure/here/file7.txt"),
        b"content7",
    )
    .unwrap();

    // 创建空文件
    fs::write(root.join("empty_file.txt"), b"").unwrap();

    // 创建二进制文件
    fs::write(root.join("binary.dat"), vec![0u8; 1024]).unwrap();

    temp_dir
}
