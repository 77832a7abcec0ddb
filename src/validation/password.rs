use serde::Serialize;

pub const PASSWORD_MIN_LEN: usize = 8;

/// bcrypt 只使用前 72 个字节
pub const PASSWORD_MAX_LEN: usize = 72;

/// 允许作为“特殊字符”的集合
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordRequirements {
    pub min_length: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub number: bool,
    pub special: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub is_valid: bool,
    /// 满足的要求条数，0 到 5
    pub score: u8,
    pub requirements: PasswordRequirements,
}

impl PasswordRequirements {
    fn as_array(&self) -> [bool; 5] {
        [
            self.min_length,
            self.uppercase,
            self.lowercase,
            self.number,
            self.special,
        ]
    }

    /// 第一条未满足的要求对应的提示
    pub fn first_unmet(&self) -> Option<&'static str> {
        const MESSAGES: [&str; 5] = [
            "Password must be at least 8 characters",
            "Password must contain at least one uppercase letter",
            "Password must contain at least one lowercase letter",
            "Password must contain at least one number",
            "Password must contain at least one special character",
        ];
        self.as_array()
            .iter()
            .position(|met| !met)
            .map(|index| MESSAGES[index])
    }
}

pub fn validate_password_strength(password: &str) -> PasswordStrength {
    let requirements = PasswordRequirements {
        min_length: password.chars().count() >= PASSWORD_MIN_LEN,
        uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
        lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
        number: password.chars().any(|c| c.is_ascii_digit()),
        special: password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)),
    };
    let score = requirements.as_array().iter().filter(|met| **met).count() as u8;

    PasswordStrength {
        is_valid: score == 5,
        score,
        requirements,
    }
}
