/// 公共验证函数模块
/// 标识符与显示名称的输入验证，供各路由与奖励引擎共用。

const MAX_IDENTIFIER_LEN: usize = 128;

/// 验证标识符：非空、最多 128 字节、不含 ':' 与控制字符（':' 是存储键的分隔符）
pub fn validate_identifier(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} 不能为空"));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(format!("{field} 长度不能超过{MAX_IDENTIFIER_LEN}字节"));
    }
    if value.contains(':') || value.chars().any(char::is_control) {
        return Err(format!("{field} 包含非法字符"));
    }
    Ok(())
}

/// 验证显示名称：1-50 字符，不含控制字符
pub fn validate_display_name(name: &str) -> Result<(), &'static str> {
    let char_count = name.chars().count();
    if char_count == 0 || char_count > 50 {
        return Err("显示名称长度需在1到50个字符之间");
    }
    if name.chars().any(char::is_control) {
        return Err("显示名称不能包含控制字符");
    }
    Ok(())
}
