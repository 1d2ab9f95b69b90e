//! Streaming writer for structured (object/array) results.
//!
//! Handlers emit ordered key-value pairs, nested containers, and scalar
//! leaves directly onto the output connection; nothing is buffered into an
//! intermediate value tree. Output is indented with two spaces. String
//! escaping is delegated to `serde_json` so the wire form is always valid
//! JSON.

use std::io::Write;

use super::errors::ResultError;

enum Container {
    Object,
    Array,
}

struct Frame {
    container: Container,
    items: usize,
}

/// Streaming structured-result writer over an output connection.
pub struct JsonWriter<'a> {
    out: &'a mut dyn Write,
    stack: Vec<Frame>,
    root_written: bool,
    pending_name: bool,
}

impl<'a> JsonWriter<'a> {
    /// Wraps the given output stream.
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self {
            out,
            stack: Vec::new(),
            root_written: false,
            pending_name: false,
        }
    }

    /// Opens an object value.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is not expected here or writing fails.
    pub fn begin_object(&mut self) -> Result<(), ResultError> {
        self.before_value()?;
        self.out.write_all(b"{")?;
        self.stack.push(Frame {
            container: Container::Object,
            items: 0,
        });
        Ok(())
    }

    /// Closes the innermost object.
    ///
    /// # Errors
    ///
    /// Returns an error when no object is open or a name dangles unused.
    pub fn end_object(&mut self) -> Result<(), ResultError> {
        if self.pending_name {
            return Err(ResultError::structure("dangling name at end of object"));
        }
        match self.stack.pop() {
            Some(Frame {
                container: Container::Object,
                items,
            }) => {
                if items > 0 {
                    self.newline_indent(self.stack.len())?;
                }
                self.out.write_all(b"}")?;
                Ok(())
            }
            Some(frame) => {
                self.stack.push(frame);
                Err(ResultError::structure("end_object inside an array"))
            }
            None => Err(ResultError::structure("end_object without begin_object")),
        }
    }

    /// Opens an array value.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is not expected here or writing fails.
    pub fn begin_array(&mut self) -> Result<(), ResultError> {
        self.before_value()?;
        self.out.write_all(b"[")?;
        self.stack.push(Frame {
            container: Container::Array,
            items: 0,
        });
        Ok(())
    }

    /// Closes the innermost array.
    ///
    /// # Errors
    ///
    /// Returns an error when no array is open.
    pub fn end_array(&mut self) -> Result<(), ResultError> {
        match self.stack.pop() {
            Some(Frame {
                container: Container::Array,
                items,
            }) => {
                if items > 0 {
                    self.newline_indent(self.stack.len())?;
                }
                self.out.write_all(b"]")?;
                Ok(())
            }
            Some(frame) => {
                self.stack.push(frame);
                Err(ResultError::structure("end_array inside an object"))
            }
            None => Err(ResultError::structure("end_array without begin_array")),
        }
    }

    /// Writes the key for the next value of the innermost object.
    ///
    /// # Errors
    ///
    /// Returns an error outside an object or after an unused name.
    pub fn name(&mut self, key: &str) -> Result<(), ResultError> {
        match self.stack.last() {
            Some(Frame {
                container: Container::Object,
                items,
            }) => {
                if self.pending_name {
                    return Err(ResultError::structure(format!(
                        "name '{key}' follows an unused name"
                    )));
                }
                let comma = *items > 0;
                let depth = self.stack.len();
                if comma {
                    self.out.write_all(b",")?;
                }
                self.newline_indent(depth)?;
                serde_json::to_writer(&mut *self.out, key)?;
                self.out.write_all(b": ")?;
                if let Some(frame) = self.stack.last_mut() {
                    frame.items += 1;
                }
                self.pending_name = true;
                Ok(())
            }
            Some(_) => Err(ResultError::structure("name inside an array")),
            None => Err(ResultError::structure("name outside an object")),
        }
    }

    /// Writes a string leaf.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is not expected here or writing fails.
    pub fn value_string(&mut self, value: &str) -> Result<(), ResultError> {
        self.before_value()?;
        serde_json::to_writer(&mut *self.out, value)?;
        Ok(())
    }

    /// Writes a boolean leaf.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is not expected here or writing fails.
    pub fn value_bool(&mut self, value: bool) -> Result<(), ResultError> {
        self.before_value()?;
        self.out
            .write_all(if value { b"true" } else { b"false" })?;
        Ok(())
    }

    /// Writes an integer leaf.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is not expected here or writing fails.
    pub fn value_i64(&mut self, value: i64) -> Result<(), ResultError> {
        self.before_value()?;
        write!(self.out, "{value}")?;
        Ok(())
    }

    /// Writes a float leaf. Non-finite values serialize as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is not expected here or writing fails.
    pub fn value_f64(&mut self, value: f64) -> Result<(), ResultError> {
        self.before_value()?;
        serde_json::to_writer(&mut *self.out, &value)?;
        Ok(())
    }

    /// Writes a null leaf.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is not expected here or writing fails.
    pub fn value_null(&mut self) -> Result<(), ResultError> {
        self.before_value()?;
        self.out.write_all(b"null")?;
        Ok(())
    }

    /// Verifies the structure is complete; called by the result returner
    /// after the handler finishes.
    ///
    /// # Errors
    ///
    /// Returns an error when containers remain open or nothing was written.
    pub fn finish(&mut self) -> Result<(), ResultError> {
        if !self.stack.is_empty() {
            return Err(ResultError::structure("unclosed structure"));
        }
        if !self.root_written {
            return Err(ResultError::structure("no structured value written"));
        }
        Ok(())
    }

    fn before_value(&mut self) -> Result<(), ResultError> {
        enum Step {
            Root,
            ObjectValue,
            ArrayValue { comma: bool, depth: usize },
        }

        let step = match self.stack.last() {
            None => {
                if self.root_written {
                    return Err(ResultError::structure("multiple root values"));
                }
                Step::Root
            }
            Some(Frame {
                container: Container::Object,
                ..
            }) => {
                if !self.pending_name {
                    return Err(ResultError::structure("value without a preceding name"));
                }
                Step::ObjectValue
            }
            Some(Frame {
                container: Container::Array,
                items,
            }) => Step::ArrayValue {
                comma: *items > 0,
                depth: self.stack.len(),
            },
        };

        match step {
            Step::Root => self.root_written = true,
            Step::ObjectValue => self.pending_name = false,
            Step::ArrayValue { comma, depth } => {
                if comma {
                    self.out.write_all(b",")?;
                }
                self.newline_indent(depth)?;
                if let Some(frame) = self.stack.last_mut() {
                    frame.items += 1;
                }
            }
        }
        Ok(())
    }

    fn newline_indent(&mut self, depth: usize) -> Result<(), ResultError> {
        self.out.write_all(b"\n")?;
        for _ in 0..depth {
            self.out.write_all(b"  ")?;
        }
        Ok(())
    }
}
