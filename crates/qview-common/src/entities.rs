// entities.rs - entity lump parsing

use crate::error::{QError, QResult};
use crate::q_shared::Vec3;

/// One `{ "key" "value" ... }` block from the entity lump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub pairs: Vec<(String, String)>,
}

impl Entity {
    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn classname(&self) -> Option<&str> {
        self.get("classname")
    }

    /// The `origin` key as three floats, if present and well formed.
    pub fn origin(&self) -> Option<Vec3> {
        let mut parts = self.get("origin")?.split_whitespace();
        let mut out = [0.0f32; 3];
        for v in out.iter_mut() {
            *v = parts.next()?.parse().ok()?;
        }
        Some(out)
    }
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Open,
    Close,
    Str(&'a str),
}

/// Parses one token, handling // comments and "quoted strings". Returns
/// `None` at end of data.
fn parse_token(data: &str) -> QResult<Option<(Token<'_>, &str)>> {
    let mut rest = data;
    loop {
        rest = rest.trim_start_matches(|c: char| c <= ' ');
        if let Some(comment) = rest.strip_prefix("//") {
            rest = comment.find('\n').map_or("", |nl| &comment[nl..]);
            continue;
        }
        break;
    }

    if rest.is_empty() {
        return Ok(None);
    }

    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted
            .find('"')
            .ok_or_else(|| QError::Format("entity lump: unterminated quoted string".into()))?;
        return Ok(Some((Token::Str(&quoted[..end]), &quoted[end + 1..])));
    }

    let end = rest.find(|c: char| c <= ' ').unwrap_or(rest.len());
    let word = &rest[..end];
    let token = match word {
        "{" => Token::Open,
        "}" => Token::Close,
        _ => Token::Str(word),
    };
    Ok(Some((token, &rest[end..])))
}

/// Parses every entity block in `text`.
pub fn parse_entities(text: &str) -> QResult<Vec<Entity>> {
    let mut entities = Vec::new();
    let mut remaining = text;

    while let Some((token, rest)) = parse_token(remaining)? {
        if token != Token::Open {
            return Err(QError::Format(format!(
                "entity lump: found {:?} when expecting {{",
                token
            )));
        }
        remaining = rest;

        let mut entity = Entity::default();
        loop {
            let (key, rest) = parse_token(remaining)?
                .ok_or_else(|| QError::Format("entity lump: EOF without closing brace".into()))?;
            let key = match key {
                Token::Close => {
                    remaining = rest;
                    break;
                }
                Token::Str(k) => k,
                Token::Open => {
                    return Err(QError::Format("entity lump: nested opening brace".into()));
                }
            };

            let (value, rest) = parse_token(rest)?
                .ok_or_else(|| QError::Format("entity lump: EOF without closing brace".into()))?;
            let value = match value {
                Token::Str(v) => v,
                _ => return Err(QError::Format("entity lump: closing brace without data".into())),
            };

            entity.pairs.push((key.to_string(), value.to_string()));
            remaining = rest;
        }
        entities.push(entity);
    }

    Ok(entities)
}

/// First entity of the given class.
pub fn find_by_classname<'a>(entities: &'a [Entity], classname: &str) -> Option<&'a Entity> {
    entities.iter().find(|e| e.classname() == Some(classname))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LUMP: &str = r#"
{
"classname" "worldspawn"
"wad" "gfx/base.wad"
}
// player
{
"classname" "info_player_start"
"origin" "480 -352 88"
"angle" "90"
}
"#;

    #[test]
    fn test_parse_entities() {
        let ents = parse_entities(LUMP).unwrap();
        assert_eq!(ents.len(), 2);
        assert_eq!(ents[0].classname(), Some("worldspawn"));
        assert_eq!(ents[0].get("wad"), Some("gfx/base.wad"));
        assert_eq!(ents[1].get("angle"), Some("90"));
        let start = find_by_classname(&ents, "info_player_start").unwrap();
        assert_eq!(start.origin(), Some([480.0, -352.0, 88.0]));
        assert!(find_by_classname(&ents, "light").is_none());
    }

    #[test]
    fn test_empty_lump() {
        assert!(parse_entities("").unwrap().is_empty());
        assert!(parse_entities("  // nothing here\n").unwrap().is_empty());
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(matches!(
            parse_entities(r#"{ "classname" "worldspawn" "#),
            Err(QError::Format(_))
        ));
        assert!(matches!(parse_entities("}"), Err(QError::Format(_))));
        assert!(matches!(
            parse_entities(r#"{ "classname" }"#),
            Err(QError::Format(_))
        ));
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(
            parse_entities(r#"{ "classname" "worldspawn }"#),
            Err(QError::Format(_))
        ));
    }

    #[test]
    fn test_bad_origin() {
        let e = Entity {
            pairs: vec![("origin".into(), "1 two 3".into())],
        };
        assert_eq!(e.origin(), None);
    }
}
