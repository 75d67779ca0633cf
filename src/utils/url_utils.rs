// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use percent_encoding::percent_decode_str;
use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 对URL路径段做百分号解码，解码失败时原样返回
pub fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// 判断路径段是否带有文件扩展名，例如 `logo.png`
pub fn has_file_extension(segment: &str) -> bool {
    match segment.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty() && !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_root_relative_url() {
        let base = Url::parse("https://baike.example.com/item/a").unwrap();
        assert_eq!(
            resolve_url(&base, "/item/b").unwrap().as_str(),
            "https://baike.example.com/item/b"
        );
    }

    #[test]
    fn test_resolve_absolute_url() {
        let base = Url::parse("https://baike.example.com/item/a").unwrap();
        assert_eq!(
            resolve_url(&base, "https://t.co/c").unwrap().as_str(),
            "https://t.co/c"
        );
    }

    #[test]
    fn test_decode_segment() {
        assert_eq!(decode_segment("%E5%BC%A0%E4%B8%89"), "张三");
        assert_eq!(decode_segment("plain"), "plain");
    }

    #[test]
    fn test_has_file_extension() {
        assert!(has_file_extension("logo.png"));
        assert!(has_file_extension("index.html"));
        assert!(!has_file_extension("张三"));
        assert!(!has_file_extension("127844"));
        assert!(!has_file_extension(".hidden"));
    }
}
