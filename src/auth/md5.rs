// -----------------------------------------------------------------------------
// ----- MD5 password digest ---------------------------------------------------

/// `"md5" + hex(md5(hex(md5(password + username)) + salt))`, the response to an
/// AuthenticationMD5Password request.
pub fn md5_password(username: &str, password: &str, salt: &[u8; 4]) -> String {
    let credentials = md5::compute(format!("{password}{username}"));

    let mut salted = Vec::with_capacity(32 + salt.len());
    salted.extend_from_slice(format!("{credentials:x}").as_bytes());
    salted.extend_from_slice(salt);

    format!("md5{:x}", md5::compute(&salted))
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
