mod stream_lifecycle;
mod tool_lifecycle;
