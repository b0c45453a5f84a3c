use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Field, Type};

const SIZED_BY_INDEX_SIZES: &[&str] = &[
	"StringIndex", "BlobIndex", "GuidIndex",
	"TypeDefOrRef", "HasConstant", "HasCustomAttribute", "HasFieldMarshal",
	"HasDeclSecurity", "MemberRefParent", "HasSemantics", "MethodDefOrRef",
	"MemberForwarded", "Implementation", "CustomAttributeType", "ResolutionScope",
	"TypeOrMethodDef", "HasCustomDebugInformation",
	"TypeDefIndex", "FieldIndex", "MethodDefIndex", "ParamIndex", "EventIndex",
	"PropertyIndex", "ModuleRefIndex", "GenericParamIndex",
];

pub fn derive(tokens: proc_macro::TokenStream) -> TokenStream {
	let DeriveInput { ident, data, .. } = syn::parse(tokens).unwrap();

	let data = match data {
		Data::Struct(data) => data,
		Data::Enum(_) => panic!("Enums are not supported"),
		Data::Union(_) => panic!("Unions are not supported"),
	};

	let table = format_ident!("{}Table", ident);
	let reads = data.fields.iter().map(|Field { ident, ty, .. }| {
		let needs_sizes = match ty {
			Type::Path(path) => path
				.path
				.get_ident()
				.map(|ident| SIZED_BY_INDEX_SIZES.iter().any(|name| ident == name))
				.unwrap_or(false),
			_ => false,
		};

		match needs_sizes {
			true => quote!(#ident: <#ty as crate::utilities::FromByteStream>::read(stream, sizes)?),
			false => quote!(#ident: <#ty as crate::utilities::FromByteStream>::read(stream, &())?),
		}
	});

	quote! {
		#[derive(Debug)]
		pub struct #table {
			row_size: usize,
			rows: Vec<#ident>,
		}

		impl #table {
			pub fn read(
				stream: &mut std::io::Cursor<&[u8]>,
				sizes: &crate::raw::indices::sizes::IndexSizes,
				len: usize,
			) -> std::io::Result<Self> {
				let start = stream.position() as usize;

				let mut rows = Vec::with_capacity(len);
				for _ in 0..len {
					rows.push(#ident { #(#reads),* })
				}

				let row_size = match len {
					0 => 0,
					_ => (stream.position() as usize - start) / len,
				};
				Ok(Self { rows, row_size })
			}

			#[inline]
			pub fn rows(&self) -> &[#ident] {
				&self.rows
			}

			#[inline]
			pub fn iter(&self) -> std::slice::Iter<'_, #ident> {
				self.rows.iter()
			}
		}

		impl Table for #table {
			fn len(&self) -> usize {
				self.rows.len()
			}

			fn kind(&self) -> TableKind {
				TableKind::#ident
			}
		}
	}
}
