// Declaration scanner used to introspect GLSL sources without a driver.
//
// Only top-level declarations are looked at: vertex inputs, uniforms (plain, opaque and atomic
// counters), uniform blocks and storage blocks. Function bodies and structs are skipped. Block
// members get std140 offsets.

use crate::shader::{
  AttributeInfo, BlockInfo, BlockMemberInfo, ShaderDataType, ShaderStage, UniformInfo,
};

#[derive(Clone, Debug, Default)]
pub(super) struct Interface {
  pub(super) attributes: Vec<AttributeInfo>,
  pub(super) uniforms: Vec<UniformInfo>,
  pub(super) blocks: Vec<(BlockInfo, Vec<BlockMemberInfo>)>,
  pub(super) storage_blocks: Vec<BlockInfo>,
  pub(super) atomic_counters: Vec<BlockInfo>,
}

#[derive(Clone, Copy, Debug, Default)]
struct Layout {
  location: Option<i64>,
  binding: Option<i64>,
  offset: Option<i64>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Storage {
  In,
  Uniform,
  Buffer,
  Other,
}

// Remove comments and preprocessor lines.
fn strip(source: &str) -> String {
  let mut out = String::with_capacity(source.len());
  let mut chars = source.chars().peekable();
  let mut line_start = true;

  while let Some(c) = chars.next() {
    match c {
      '/' if chars.peek() == Some(&'/') => {
        for c in chars.by_ref() {
          if c == '\n' {
            out.push('\n');
            line_start = true;
            break;
          }
        }
      }

      '/' if chars.peek() == Some(&'*') => {
        chars.next();
        let mut last = ' ';
        for c in chars.by_ref() {
          if last == '*' && c == '/' {
            break;
          }
          last = c;
        }
        out.push(' ');
      }

      '#' if line_start => {
        for c in chars.by_ref() {
          if c == '\n' {
            out.push('\n');
            break;
          }
        }
      }

      '\n' => {
        out.push('\n');
        line_start = true;
      }

      _ => {
        if !c.is_whitespace() {
          line_start = false;
        }
        out.push(c);
      }
    }
  }

  out
}

fn tokenize(source: &str) -> Vec<String> {
  let mut tokens = Vec::new();
  let mut current = String::new();

  for c in source.chars() {
    if c.is_alphanumeric() || c == '_' || c == '.' {
      current.push(c);
      continue;
    }

    if !current.is_empty() {
      tokens.push(std::mem::take(&mut current));
    }

    if !c.is_whitespace() {
      tokens.push(c.to_string());
    }
  }

  if !current.is_empty() {
    tokens.push(current);
  }

  tokens
}

fn round_up(value: usize, align: usize) -> usize {
  (value + align - 1) / align * align
}

// Alignment and size of a block member.
fn std140(ty: ShaderDataType, count: usize) -> (usize, usize) {
  let (align, size) = match ty {
    ShaderDataType::Matrix3 => (16, 48),
    ShaderDataType::Matrix4 => (16, 64),
    _ => match ty.component_count() {
      1 => (4, 4),
      2 => (8, 8),
      3 => (16, 12),
      _ => (16, 16),
    },
  };

  if count > 1 {
    (16, round_up(size, 16) * count)
  } else {
    (align, size)
  }
}

struct Parser {
  tokens: Vec<String>,
  pos: usize,
}

impl Parser {
  fn peek(&self) -> Option<&str> {
    self.tokens.get(self.pos).map(String::as_str)
  }

  fn next(&mut self) -> Option<String> {
    let token = self.tokens.get(self.pos).cloned();
    self.pos += 1;
    token
  }

  fn eat(&mut self, token: &str) -> bool {
    if self.peek() == Some(token) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  // Skip past the `}` matching an already consumed `{`.
  fn skip_braces(&mut self) {
    let mut depth = 1;

    while let Some(token) = self.next() {
      match token.as_str() {
        "{" => depth += 1,
        "}" => {
          depth -= 1;
          if depth == 0 {
            return;
          }
        }
        _ => (),
      }
    }
  }

  // Skip past the next `;` outside of parentheses.
  fn skip_statement(&mut self) {
    let mut depth = 0;

    while let Some(token) = self.next() {
      match token.as_str() {
        "(" => depth += 1,
        ")" => depth -= 1,
        ";" if depth <= 0 => return,
        _ => (),
      }
    }
  }

  fn layout(&mut self, layout: &mut Layout) {
    if !self.eat("(") {
      return;
    }

    while let Some(key) = self.next() {
      if key == ")" {
        return;
      }

      if key == "," {
        continue;
      }

      let value = if self.eat("=") {
        self.next().and_then(|v| v.parse::<i64>().ok())
      } else {
        None
      };

      match key.as_str() {
        "location" => layout.location = value,
        "binding" => layout.binding = value,
        "offset" => layout.offset = value,
        _ => (),
      }
    }
  }

  fn array_size(&mut self) -> usize {
    if !self.eat("[") {
      return 1;
    }

    let size = match self.peek() {
      Some("]") => 1,
      _ => self
        .next()
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(1),
    };

    self.eat("]");
    size
  }

  fn skip_qualifiers(&mut self) {
    while let Some(token) = self.peek() {
      match token {
        "lowp" | "mediump" | "highp" | "flat" | "smooth" | "noperspective" | "centroid"
        | "invariant" | "readonly" | "writeonly" | "coherent" | "volatile" | "restrict"
        | "patch" | "sample" => self.pos += 1,
        _ => return,
      }
    }
  }

  // Members of a block, up to and including the closing `}`.
  fn members(&mut self) -> (Vec<BlockMemberInfo>, usize) {
    let mut members = Vec::new();
    let mut cursor = 0;

    while let Some(token) = self.peek() {
      if token == "}" {
        self.pos += 1;
        break;
      }

      if token == "layout" {
        self.pos += 1;
        self.layout(&mut Layout::default());
        continue;
      }

      self.skip_qualifiers();

      let ty = match self.next() {
        Some(ty) => ty,
        None => break,
      };

      loop {
        let name = match self.next() {
          Some(name) => name,
          None => break,
        };
        let count = self.array_size();

        if let Some(ty) = ShaderDataType::from_glsl(&ty) {
          let (align, size) = std140(ty, count);
          let offset = round_up(cursor, align);
          cursor = offset + size;

          members.push(BlockMemberInfo {
            name,
            ty,
            element_count: count,
            offset,
          });
        }

        if !self.eat(",") {
          break;
        }
      }

      self.skip_statement();
    }

    (members, round_up(cursor, 16))
  }
}

/// Whether a stage source defines `void main()`. Linking fails for any stage that does not.
pub(super) fn defines_main(source: &str) -> bool {
  tokenize(&strip(source))
    .windows(3)
    .any(|w| w[0] == "void" && w[1] == "main" && w[2] == "(")
}

/// Add the interface declared by one stage source to `interface`.
pub(super) fn scan(interface: &mut Interface, stage: ShaderStage, source: &str) {
  let mut parser = Parser {
    tokens: tokenize(&strip(source)),
    pos: 0,
  };

  while let Some(token) = parser.peek() {
    match token {
      ";" => parser.pos += 1,
      "{" => {
        parser.pos += 1;
        parser.skip_braces();
      }
      _ => declaration(&mut parser, interface, stage),
    }
  }
}

fn declaration(parser: &mut Parser, interface: &mut Interface, stage: ShaderStage) {
  let mut layout = Layout::default();
  let mut storage = Storage::Other;

  loop {
    match parser.peek() {
      Some("layout") => {
        parser.pos += 1;
        parser.layout(&mut layout);
      }

      Some("in") | Some("attribute") => {
        parser.pos += 1;
        storage = Storage::In;
      }

      Some("uniform") => {
        parser.pos += 1;
        storage = Storage::Uniform;
      }

      Some("buffer") => {
        parser.pos += 1;
        storage = Storage::Buffer;
      }

      Some("out") | Some("varying") | Some("const") | Some("shared") => parser.pos += 1,

      Some("precision") | Some("struct") => {
        // struct bodies are skipped along with any declarator
        while let Some(token) = parser.next() {
          match token.as_str() {
            "{" => parser.skip_braces(),
            ";" => return,
            _ => (),
          }
        }
        return;
      }

      Some("lowp") | Some("mediump") | Some("highp") | Some("flat") | Some("smooth")
      | Some("noperspective") | Some("centroid") | Some("invariant") | Some("readonly")
      | Some("writeonly") | Some("coherent") | Some("volatile") | Some("restrict")
      | Some("patch") | Some("sample") => parser.pos += 1,

      _ => break,
    }
  }

  let ty = match parser.next() {
    Some(ty) => ty,
    None => return,
  };

  if ty == ";" {
    return;
  }

  // interface block
  if parser.eat("{") {
    let (members, byte_size) = parser.members();
    parser.skip_statement();
    add_block(interface, storage, layout, ty, members, byte_size);
    return;
  }

  loop {
    let name = match parser.next() {
      Some(name) => name,
      None => return,
    };

    // function declaration or definition
    if parser.eat("(") {
      let mut depth = 1;
      while let Some(token) = parser.next() {
        match token.as_str() {
          "(" => depth += 1,
          ")" => {
            depth -= 1;
            if depth == 0 {
              break;
            }
          }
          _ => (),
        }
      }

      if parser.eat("{") {
        parser.skip_braces();
      } else {
        parser.eat(";");
      }

      return;
    }

    let count = parser.array_size();
    add_variable(interface, stage, storage, layout, &ty, name, count);

    // initializers
    while let Some(token) = parser.peek() {
      if token == "," || token == ";" {
        break;
      }
      parser.pos += 1;
    }

    if !parser.eat(",") {
      parser.eat(";");
      return;
    }
  }
}

fn add_variable(
  interface: &mut Interface,
  stage: ShaderStage,
  storage: Storage,
  layout: Layout,
  ty: &str,
  name: String,
  count: usize,
) {
  match storage {
    Storage::In if stage == ShaderStage::Vertex => {
      let ty = match ShaderDataType::from_glsl(ty) {
        Some(ty) => ty,
        None => return,
      };

      let location = layout
        .location
        .map(|l| l as i32)
        .unwrap_or(interface.attributes.len() as i32);

      interface.attributes.push(AttributeInfo {
        name,
        location,
        ty,
        element_count: count,
      });
    }

    Storage::Uniform if ty == "atomic_uint" => {
      let binding = layout.binding.unwrap_or(0) as i32;
      let end = layout.offset.unwrap_or(0) as usize + 4 * count;

      match interface
        .atomic_counters
        .iter_mut()
        .find(|b| b.binding == binding)
      {
        Some(block) => {
          block.byte_size = block.byte_size.max(end);
          block.member_count += 1;
        }

        None => {
          let index = interface.atomic_counters.len() as u32;
          interface.atomic_counters.push(BlockInfo {
            name,
            index,
            binding,
            byte_size: end,
            member_count: 1,
          });
        }
      }
    }

    Storage::Uniform => {
      let ty = match ShaderDataType::from_glsl(ty) {
        Some(ty) => ty,
        None => return,
      };

      if interface.uniforms.iter().any(|u| u.name == name) {
        return;
      }

      let location = interface
        .uniforms
        .iter()
        .map(|u| u.element_count)
        .sum::<usize>() as i32;

      interface.uniforms.push(UniformInfo {
        name,
        location,
        ty,
        element_count: count,
        binding: layout.binding.map(|b| b as i32).unwrap_or(-1),
      });
    }

    _ => (),
  }
}

fn add_block(
  interface: &mut Interface,
  storage: Storage,
  layout: Layout,
  name: String,
  members: Vec<BlockMemberInfo>,
  byte_size: usize,
) {
  let binding = layout.binding.map(|b| b as i32).unwrap_or(-1);

  match storage {
    Storage::Uniform => {
      if interface.blocks.iter().any(|(b, _)| b.name == name) {
        return;
      }

      let info = BlockInfo {
        name,
        index: interface.blocks.len() as u32,
        binding,
        byte_size,
        member_count: members.len(),
      };

      interface.blocks.push((info, members));
    }

    Storage::Buffer => {
      if interface.storage_blocks.iter().any(|b| b.name == name) {
        return;
      }

      let info = BlockInfo {
        name,
        index: interface.storage_blocks.len() as u32,
        binding,
        byte_size,
        member_count: members.len(),
      };

      interface.storage_blocks.push(info);
    }

    _ => (),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const VS: &str = r#"
    #version 330 core
    // inputs
    layout (location = 0) in vec3 attr_pos;
    in highp vec2 attr_uv;

    uniform mat4 model_view_projection;
    uniform sampler2D textures[4];
    uniform float opacity = 1.0, fade;

    struct Light { vec3 pos; float range; };

    layout (std140) uniform cbLights {
      vec4 ambient;
      vec3 directions[2];
      float count;
      mat4 shadow;
    };

    /* a block comment with uniform float hidden; inside */
    void main() {
      uniform_looking_local = 1.;
      gl_Position = model_view_projection * vec4(attr_pos, 1.);
    }
  "#;

  #[test]
  fn vertex_interface() {
    let mut interface = Interface::default();
    scan(&mut interface, ShaderStage::Vertex, VS);

    let attributes: Vec<_> = interface
      .attributes
      .iter()
      .map(|a| (a.name.as_str(), a.location, a.ty))
      .collect();
    assert_eq!(
      attributes,
      vec![
        ("attr_pos", 0, ShaderDataType::FloatVec3),
        ("attr_uv", 1, ShaderDataType::FloatVec2),
      ]
    );

    let uniforms: Vec<_> = interface
      .uniforms
      .iter()
      .map(|u| (u.name.as_str(), u.location, u.element_count))
      .collect();
    assert_eq!(
      uniforms,
      vec![
        ("model_view_projection", 0, 1),
        ("textures", 1, 4),
        ("opacity", 5, 1),
        ("fade", 6, 1),
      ]
    );
  }

  #[test]
  fn uniform_block_offsets() {
    let mut interface = Interface::default();
    scan(&mut interface, ShaderStage::Vertex, VS);

    assert_eq!(interface.blocks.len(), 1);
    let (info, members) = &interface.blocks[0];
    let offsets: Vec<_> = members.iter().map(|m| (m.name.as_str(), m.offset)).collect();

    assert_eq!(info.name, "cbLights");
    assert_eq!(
      offsets,
      vec![("ambient", 0), ("directions", 16), ("count", 48), ("shadow", 64)]
    );
    assert_eq!(info.byte_size, 128);
  }

  #[test]
  fn fragment_inputs_are_not_attributes() {
    let mut interface = Interface::default();
    scan(
      &mut interface,
      ShaderStage::Fragment,
      "precision mediump float; in vec2 uv; uniform sampler2D tex; void main() {}",
    );

    assert!(interface.attributes.is_empty());
    assert_eq!(interface.uniforms.len(), 1);
    assert_eq!(interface.uniforms[0].ty, ShaderDataType::Texture2D);
  }

  #[test]
  fn atomic_counters_and_storage_blocks() {
    let mut interface = Interface::default();
    scan(
      &mut interface,
      ShaderStage::Compute,
      "layout (binding = 2, offset = 0) uniform atomic_uint hits;
       layout (binding = 2, offset = 4) uniform atomic_uint misses;
       layout (std430, binding = 1) buffer Particles { vec4 data[64]; };
       layout (binding = 0, rgba8) uniform writeonly image2D result;
       void main() {}",
    );

    assert_eq!(interface.atomic_counters.len(), 1);
    assert_eq!(interface.atomic_counters[0].name, "hits");
    assert_eq!(interface.atomic_counters[0].binding, 2);
    assert_eq!(interface.atomic_counters[0].byte_size, 8);

    assert_eq!(interface.storage_blocks.len(), 1);
    assert_eq!(interface.storage_blocks[0].binding, 1);

    assert_eq!(interface.uniforms[0].ty, ShaderDataType::Image2D);
    assert_eq!(interface.uniforms[0].binding, 0);
  }

  #[test]
  fn entry_point() {
    assert!(defines_main(VS));
    assert!(defines_main("void main (void) {}"));
    assert!(!defines_main("// void main() {}\nvoid mainImage() {}"));
    assert!(!defines_main("uniform vec4 color;"));
  }
}
