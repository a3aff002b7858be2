use axum::http::Method;

/// `/api/loans`以下のパスから決まる転送先の操作
///
/// パス上のIDは文字列のまま運び、検証は貸出サービス側で行う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayRoute {
    CreateLoan,
    ReturnLoan { loan_id: String },
    LoansByUser { user_id: String },
    LoanById { loan_id: String },
    AllLoans,
}

/// メソッドと`/api/loans`より後ろのパスから操作を決める
///
/// 判定の優先順位：
/// 1. POST かつ空パス → 作成
/// 2. PUT かつ`/return`で終わる → 返却
/// 3. GET かつ`/user/`で始まる → 利用者別一覧
/// 4. GET かつ空でも`/`でもない → ID指定
/// 5. GET かつ空または`/` → 全件
///
/// どれにも当たらなければ`None`（404）。
pub fn classify(method: &Method, path: &str) -> Option<GatewayRoute> {
    let is_root = path.is_empty() || path == "/";

    if method == Method::POST && path.is_empty() {
        return Some(GatewayRoute::CreateLoan);
    }

    if method == Method::PUT {
        if let Some(rest) = path.strip_suffix("/return") {
            let loan_id = rest.strip_prefix('/').unwrap_or(rest);
            return Some(GatewayRoute::ReturnLoan {
                loan_id: loan_id.to_string(),
            });
        }
    }

    if method == Method::GET {
        if let Some(user_id) = path.strip_prefix("/user/") {
            return Some(GatewayRoute::LoansByUser {
                user_id: user_id.to_string(),
            });
        }
        if !is_root {
            let loan_id = path.strip_prefix('/').unwrap_or(path);
            return Some(GatewayRoute::LoanById {
                loan_id: loan_id.to_string(),
            });
        }
        return Some(GatewayRoute::AllLoans);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify(&Method::POST, ""), Some(GatewayRoute::CreateLoan));
        assert_eq!(
            classify(&Method::PUT, "/5/return"),
            Some(GatewayRoute::ReturnLoan {
                loan_id: "5".into()
            })
        );
        assert_eq!(
            classify(&Method::GET, "/user/3"),
            Some(GatewayRoute::LoansByUser {
                user_id: "3".into()
            })
        );
        assert_eq!(
            classify(&Method::GET, "/9"),
            Some(GatewayRoute::LoanById {
                loan_id: "9".into()
            })
        );
        assert_eq!(classify(&Method::GET, ""), Some(GatewayRoute::AllLoans));
        assert_eq!(classify(&Method::GET, "/"), Some(GatewayRoute::AllLoans));
    }

    #[test]
    fn test_unmatched_requests() {
        assert_eq!(classify(&Method::POST, "/"), None);
        assert_eq!(classify(&Method::POST, "/5/return"), None);
        assert_eq!(classify(&Method::PUT, "/5"), None);
        assert_eq!(classify(&Method::DELETE, "/5"), None);
    }

    #[test]
    fn test_user_prefix_wins_over_by_id() {
        assert_eq!(
            classify(&Method::GET, "/user/"),
            Some(GatewayRoute::LoansByUser {
                user_id: String::new()
            })
        );
    }
}
